pub mod h4_builder;
