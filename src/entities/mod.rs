pub mod bin_location;
pub mod package;
pub mod package_bin_assignment;
pub mod shipment;
pub mod shipping_rate;
pub mod shipping_zone;
pub mod storage_charge;
pub mod storage_pricing_policy;
pub mod warehouse;
