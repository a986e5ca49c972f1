//! `CORBA::Context`: a flat set of named string properties carried alongside a [`crate::request::Request`]
//! independently of the GIOP-level [`crate::security::ServiceContext`] headers used for security and
//! transaction propagation.

/// A named string property list, propagated verbatim between a `Request` and its `ServerRequest`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    properties: Vec<(String, String)>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, overwriting any existing property of that name.
    pub fn set_one_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value.into(),
            None => self.properties.push((name, value.into())),
        }
    }

    pub fn get_value(&self, name: &str) -> Option<&str> {
        self.properties.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// Removes `name`, returning whether a property was present.
    pub fn delete_value(&mut self, name: &str) -> bool {
        let len = self.properties.len();
        self.properties.retain(|(n, _)| n != name);
        self.properties.len() != len
    }

    pub fn values(&self) -> &[(String, String)] {
        &self.properties
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_one_value_overwrites_existing_property() {
        let mut ctx = Context::new();
        ctx.set_one_value("user", "alice");
        ctx.set_one_value("user", "bob");
        assert_eq!(ctx.get_value("user"), Some("bob"));
        assert_eq!(ctx.values().len(), 1);
    }

    #[test]
    fn delete_value_reports_whether_it_was_present() {
        let mut ctx = Context::new();
        ctx.set_one_value("locale", "en_US");
        assert!(ctx.delete_value("locale"));
        assert!(!ctx.delete_value("locale"));
        assert!(ctx.get_value("locale").is_none());
    }
}
