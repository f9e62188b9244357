pub mod claims;

pub use claims::decode_organization_id;
