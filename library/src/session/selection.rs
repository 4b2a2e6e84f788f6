use crate::pipeline::stage::StageHandle;

/// Weak references to "the currently selected module" and "the currently
/// selected parameter". Never owning; resolution happens at use time and
/// failure degrades to "no selection".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    module: Option<StageHandle>,
    option: Option<String>,
}

impl Selection {
    pub fn module(&self) -> Option<StageHandle> {
        self.module
    }

    pub fn option(&self) -> Option<&str> {
        self.option.as_deref()
    }

    pub(crate) fn select_module(&mut self, handle: StageHandle) {
        self.module = Some(handle);
        self.option = None;
    }

    pub(crate) fn select_option(&mut self, key: String) {
        self.option = Some(key);
    }

    pub(crate) fn clear(&mut self) {
        self.module = None;
        self.option = None;
    }

    pub(crate) fn clear_if_module(&mut self, handle: StageHandle) {
        if self.module == Some(handle) {
            self.clear();
        }
    }
}
