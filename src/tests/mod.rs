mod config;
mod helpers;
mod tree;
