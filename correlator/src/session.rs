use crate::source::Platform;
use crate::CorrelatorError;

/// Kernel event categories a parser needs enabled at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKeyword {
    Process,
    Thread,
    ContextSwitch,
    /// Kernel stack sampling; Windows-only.
    Profile,
}

/// Capture-session requirements a parser declares up front: the kernel
/// keywords and user providers it expects to find in the trace.
///
/// Validation is the loud half of the error model: requesting a
/// capability the platform cannot provide is a configuration-time
/// contract violation and fails fast, unlike data-level noise which is
/// tolerated during the parse pass.
#[derive(Debug, Clone, Default)]
pub struct SessionPlan {
    pub kernel: Vec<KernelKeyword>,
    pub providers: Vec<String>,
}

impl SessionPlan {
    pub fn new() -> Self {
        SessionPlan::default()
    }

    pub fn kernel(mut self, keyword: KernelKeyword) -> Self {
        self.kernel.push(keyword);
        self
    }

    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.providers.push(name.into());
        self
    }

    pub fn validate(&self, platform: Platform) -> Result<(), CorrelatorError> {
        for keyword in &self.kernel {
            if *keyword == KernelKeyword::Profile && platform != Platform::Windows {
                return Err(CorrelatorError::UnsupportedCapability {
                    keyword: *keyword,
                    platform,
                });
            }
        }
        Ok(())
    }
}
