mod abuse;
mod common;
mod routing;
