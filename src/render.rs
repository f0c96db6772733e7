//! Service definition rendering.
//!
//! Pure templating: a validated descriptor and a target format in, the file
//! content out. Nothing here touches the filesystem or runs a process.

use crate::descriptor::ServiceDescriptor;
use crate::error::ServiceError;

pub mod escape;
mod launchd_plist;
mod systemd_unit;

pub use launchd_plist::{stderr_log_path, stdout_log_path};

/// On-disk definition formats understood by the native managers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    SystemdUnit,
    LaunchdPlist,
}

/// Validate `descriptor` and render it in `format`.
pub fn render_definition(
    descriptor: &ServiceDescriptor,
    format: DefinitionFormat,
) -> Result<String, ServiceError> {
    descriptor.validate()?;
    match format {
        DefinitionFormat::SystemdUnit => Ok(systemd_unit::render(descriptor)),
        DefinitionFormat::LaunchdPlist => launchd_plist::render(descriptor),
    }
}

/// Format seconds for systemd time spans: whole seconds as `Ns`, otherwise milliseconds.
pub(crate) fn systemd_timespan(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{}s", secs as u64)
    } else {
        format!("{}ms", (secs * 1000.0).round() as u64)
    }
}
