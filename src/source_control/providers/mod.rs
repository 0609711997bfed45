pub mod bitbucket;

pub use bitbucket::BitbucketSourceCodeRepo;
