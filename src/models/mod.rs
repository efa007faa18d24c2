//! Data models for the visitor flow

pub mod de;
pub mod employee;
pub mod image;
pub mod preview;
pub mod visitor;

pub use employee::EmployeeRecord;
pub use image::{ImageKind, ImageReference};
pub use preview::{DisplayVisitor, PreviewData, PreviewSource};
pub use visitor::{
    Asset, AssetType, Fingerprint, Guest, HostDetails, VisitorFormData, VisitorRecord,
    VisitorStatus,
};
