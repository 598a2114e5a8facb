pub mod param_fuzzer;
