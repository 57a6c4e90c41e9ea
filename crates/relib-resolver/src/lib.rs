mod matcher;
mod order;
mod resolve;
mod session;
mod types;

pub use matcher::DescriptorMatcher;
pub use order::install_order;
pub use resolve::Resolver;
pub use session::{ResolutionSession, SessionConfig};
pub use types::{
    EmptyCatalog, PackageCatalog, RebuildSet, RequirementConflict, RequirementEntry, Resolution,
};

#[cfg(test)]
mod tests;
