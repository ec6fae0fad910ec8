pub mod group;
pub mod invite;
pub mod otp;
pub mod sponsor;
