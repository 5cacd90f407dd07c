pub mod store;

pub use store::{
    CrConfigStore, DeliveryServiceRow, ProfileParameterRow, RegexRow, StaticDnsRow, StoreError,
    StoreResult,
};
