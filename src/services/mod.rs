// Pricing
pub mod quotes;
pub mod rates;
pub mod zones;

// Storage billing and capacity
pub mod bins;
pub mod storage;
