/// Custom variables declared in a `$VARIABLES` block, in declaration order.
///
/// Redeclaring a name replaces its value but keeps its original position,
/// which matters because custom variables are substituted in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableTable {
    entries: Vec<(String, String)>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `name=value` lines. Blank lines, `#` comments, lines without
    /// `=` and lines with an empty name are skipped. Only the first `=`
    /// separates, so values may contain `=` themselves.
    pub fn parse(body: &str) -> Self {
        let mut table = VariableTable::new();
        for line in body.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, value)) = line.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            table.insert(name, value.trim());
        }
        table
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = VariableTable::new();
        for (name, value) in iter {
            table.insert(name, value);
        }
        table
    }
}
