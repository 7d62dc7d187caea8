#![allow(dead_code)]

pub mod environment;
pub mod fake_helper;
