pub mod crawler;
pub mod directories;
pub mod dns_whois;
pub mod ports;
pub mod s3_buckets;
pub mod subdomain;
