//! Unit types and the catalog they are looked up in

pub mod catalog;
pub mod loader;

pub use catalog::{
    Attack, AttackRange, AttackSpecials, DamageType, MovementProfile, TypeCatalog, UnitCatalog,
    UnitType, UNREACHABLE,
};
pub use loader::{load_catalog, parse_catalog};
