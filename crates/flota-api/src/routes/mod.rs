//! # Route Modules
//!
//! | Prefix                | Module          |
//! |-----------------------|-----------------|
//! | `/v1/incidents/*`     | [`incidents`]   |
//! | `/v1/work-orders/*`   | [`work_orders`] |
//! | `/v1/equipment*`      | [`equipment`]   |
//! | `/v1/audit/*`         | [`audit`]       |
//! | `/v1/billing/*`       | [`billing`]     |

pub mod audit;
pub mod billing;
pub mod equipment;
pub mod incidents;
pub mod work_orders;
