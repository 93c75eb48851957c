pub mod script_io;
