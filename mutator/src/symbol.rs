use std::collections::HashMap;
use std::fmt;

/// Interned identifier. Only meaningful together with the `SymbolTable` that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(usize);

#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<String>,
    string_to_symbol: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, s: String) -> Symbol {
        let sym = Symbol(self.symbols.len());
        self.string_to_symbol.insert(s.clone(), sym);
        self.symbols.push(s);
        sym
    }

    /// Intern `name`, returning the existing symbol if it was seen before.
    pub fn to_sym(&mut self, name: &str) -> Symbol {
        match self.lookup(name) {
            Some(s) => s,
            None => self.insert(String::from(name)),
        }
    }

    pub fn from_sym(&self, sym: Symbol) -> &str {
        &self.symbols[sym.0]
    }

    pub fn lookup(&self, s: &str) -> Option<Symbol> {
        self.string_to_symbol.get(s).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
