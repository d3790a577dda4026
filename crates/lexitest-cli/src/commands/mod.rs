pub mod init;
pub mod report;
pub mod run;
pub mod simulate;
pub mod validate;
