pub mod rhythm;
