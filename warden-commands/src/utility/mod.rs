pub mod help;
pub mod serverinfo;
pub mod userinfo;
pub mod warnings;
