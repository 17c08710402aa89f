pub mod direct;
pub mod manifest;
pub mod opt_verilog;
pub mod staged;
