//! different utility modules used throughout the project
/// tiny module to set up logging and to save solution into file
pub mod logger;
