use crate::context::ThreadContext;
use crate::pj::_string;

/// A PROJ error code, as reported by `proj_errno` or `proj_context_errno`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Errno(pub libc::c_int);

impl Errno {
    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }

    /// The human readable message PROJ associates with this code.
    pub fn message(&self, context: &ThreadContext) -> String {
        let ptr = unsafe { proj_sys::proj_context_errno_string(context.as_ptr(), self.0) };
        if ptr.is_null() {
            return format!("PROJ error {}", self.0);
        }
        unsafe { _string(ptr) }.unwrap_or_else(|_| format!("PROJ error {}", self.0))
    }
}
