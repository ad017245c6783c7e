use fnv::FnvHashMap;
use std::sync::Arc;

/// An interned string. Two names are equal if and only if they were interned from equal strings
/// by the same `NameRegistry`. Ordering follows interning order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(u32);

impl Name {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Interns strings into `Name`s. The registry is owned explicitly by whoever needs it (usually
/// the renderer) and passed by reference to components that create or display names.
#[derive(Default)]
pub struct NameRegistry {
    lookup: FnvHashMap<Arc<str>, Name>,
    strings: Vec<Arc<str>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn intern(
        &mut self,
        string: &str,
    ) -> Name {
        if let Some(&name) = self.lookup.get(string) {
            return name;
        }

        let name = Name(self.strings.len() as u32);
        let string: Arc<str> = Arc::from(string);
        log::trace!("Interned name {:?} as {}", string, name.0);
        self.strings.push(string.clone());
        self.lookup.insert(string, name);
        name
    }

    /// Returns the name if the string was interned before, without interning it
    pub fn find(
        &self,
        string: &str,
    ) -> Option<Name> {
        self.lookup.get(string).copied()
    }

    pub fn get(
        &self,
        name: Name,
    ) -> Option<&str> {
        self.strings.get(name.0 as usize).map(|x| &**x)
    }

    /// Like `get` but always returns something printable, for logs and error messages
    pub fn display(
        &self,
        name: Name,
    ) -> &str {
        self.get(name).unwrap_or("<unknown name>")
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
