pub mod tracer;
