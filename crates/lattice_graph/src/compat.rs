// SPDX-License-Identifier: MIT OR Apache-2.0
//! Type compatibility resolution between ports.
//!
//! A value of type `A` may flow into a port of type `B` when, in order:
//!
//! 1. the pair is not registered incompatible (symmetric, always wins), and
//! 2. an adapter declares the pair assignable, or
//! 3. `B` is assignable from `A` (equal, wildcard, or a declared supertype), or
//! 4. a conversion from `A` to `B` is registered.
//!
//! The registry is assembled once through [`TypeRegistryBuilder`] and is
//! immutable afterwards. [`TypeRegistry::global`] lazily builds a shared
//! default with the built-in adapters.

use crate::port::{PortType, PortValue};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Function converting a value of one port type into another
pub type ConversionFn = fn(&PortValue) -> Option<PortValue>;

/// A registered conversion between two port types
#[derive(Debug, Clone, Copy)]
pub struct Conversion {
    /// Human readable name of the conversion
    pub name: &'static str,
    /// The conversion function
    pub convert: ConversionFn,
}

/// Conversions and incompatibility overrides contributed by adapters
#[derive(Debug, Default)]
pub struct ConversionTable {
    conversions: IndexMap<(PortType, PortType), Conversion>,
    incompatible: HashSet<(PortType, PortType)>,
}

impl ConversionTable {
    /// Register a conversion from `from` to `to`, replacing any earlier one
    pub fn add_conversion(
        &mut self,
        from: PortType,
        to: PortType,
        name: &'static str,
        convert: ConversionFn,
    ) {
        self.conversions.insert((from, to), Conversion { name, convert });
    }

    /// Mark a pair as incompatible in both directions
    pub fn add_incompatible(&mut self, a: PortType, b: PortType) {
        self.incompatible.insert((b.clone(), a.clone()));
        self.incompatible.insert((a, b));
    }

    /// Number of registered conversions
    pub fn conversion_count(&self) -> usize {
        self.conversions.len()
    }
}

/// A component contributing type relationships to the registry.
///
/// Adapters are registered explicitly through
/// [`TypeRegistryBuilder::with_adapter`].
pub trait TypeAdapter: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Contribute conversions and incompatibility declarations
    fn register(&self, table: &mut ConversionTable) {
        let _ = table;
    }

    /// Whether this adapter makes `from` directly assignable to `to`
    fn are_assignable(&self, from: &PortType, to: &PortType) -> bool {
        let _ = (from, to);
        false
    }

    /// Adapt a value for a pair this adapter declared assignable.
    /// The default passes the value through unchanged.
    fn adapt(&self, value: &PortValue, to: &PortType) -> Option<PortValue> {
        let _ = to;
        Some(value.clone())
    }
}

/// Builder assembling a [`TypeRegistry`]
#[derive(Default)]
pub struct TypeRegistryBuilder {
    adapters: Vec<Box<dyn TypeAdapter>>,
    supertypes: HashMap<String, Vec<PortType>>,
    table: ConversionTable,
}

impl TypeRegistryBuilder {
    /// Add the built-in numeric/vector conversions and list wrapping
    pub fn with_defaults(self) -> Self {
        self.with_adapter(BuiltinConversions).with_adapter(ListAdapter)
    }

    /// Register an adapter
    pub fn with_adapter(mut self, adapter: impl TypeAdapter + 'static) -> Self {
        adapter.register(&mut self.table);
        self.adapters.push(Box::new(adapter));
        self
    }

    /// Declare that the custom type `name` is a subtype of `parent`
    pub fn declare_subtype(mut self, name: impl Into<String>, parent: PortType) -> Self {
        self.supertypes.entry(name.into()).or_default().push(parent);
        self
    }

    /// Register a single conversion
    pub fn with_conversion(
        mut self,
        from: PortType,
        to: PortType,
        name: &'static str,
        convert: ConversionFn,
    ) -> Self {
        self.table.add_conversion(from, to, name, convert);
        self
    }

    /// Mark a pair as incompatible in both directions
    pub fn with_incompatible(mut self, a: PortType, b: PortType) -> Self {
        self.table.add_incompatible(a, b);
        self
    }

    /// Finish the registry
    pub fn build(self) -> TypeRegistry {
        tracing::debug!(
            adapters = self.adapters.len(),
            conversions = self.table.conversion_count(),
            "Type registry built"
        );
        TypeRegistry {
            adapters: self.adapters,
            supertypes: self.supertypes,
            table: self.table,
        }
    }
}

/// Immutable table deciding which port types may be connected
pub struct TypeRegistry {
    adapters: Vec<Box<dyn TypeAdapter>>,
    supertypes: HashMap<String, Vec<PortType>>,
    table: ConversionTable,
}

impl TypeRegistry {
    /// Start building a registry
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Process-wide registry with the built-in adapters, built on first use
    pub fn global() -> Arc<TypeRegistry> {
        static GLOBAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TypeRegistry::builder().with_defaults().build())))
    }

    /// Whether the pair was registered incompatible
    pub fn is_incompatible(&self, from: &PortType, to: &PortType) -> bool {
        self.table.incompatible.contains(&(from.clone(), to.clone()))
    }

    /// Standard assignability: equality, wildcards, lists and declared supertypes
    pub fn is_assignable(&self, from: &PortType, to: &PortType) -> bool {
        if from == to || from.is_any() || to.is_any() {
            return true;
        }
        match (from, to) {
            (PortType::List(a), PortType::List(b)) => self.is_assignable(a, b),
            (PortType::Custom(name), _) => self.has_supertype(name, to),
            _ => false,
        }
    }

    fn has_supertype(&self, name: &str, target: &PortType) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for parent in self.supertypes.get(&current).into_iter().flatten() {
                if parent == target {
                    return true;
                }
                if let PortType::Custom(parent_name) = parent {
                    pending.push(parent_name.clone());
                }
            }
        }
        false
    }

    /// Registered conversion for the pair, if any
    pub fn conversion(&self, from: &PortType, to: &PortType) -> Option<&Conversion> {
        self.table.conversions.get(&(from.clone(), to.clone()))
    }

    /// Whether an output of type `from` may feed an input of type `to`
    pub fn can_connect(&self, from: &PortType, to: &PortType) -> bool {
        if self.is_incompatible(from, to) {
            return false;
        }
        self.adapters.iter().any(|a| a.are_assignable(from, to))
            || self.is_assignable(from, to)
            || self.conversion(from, to).is_some()
    }

    /// Convert a value flowing from a `from` port into a `to` port
    pub fn convert(&self, value: &PortValue, from: &PortType, to: &PortType) -> Option<PortValue> {
        if self.is_incompatible(from, to) {
            return None;
        }
        if let Some(adapter) = self.adapters.iter().find(|a| a.are_assignable(from, to)) {
            return adapter.adapt(value, to);
        }
        if self.is_assignable(from, to) {
            return Some(value.clone());
        }
        self.conversion(from, to).and_then(|c| (c.convert)(value))
    }

    /// Names of the registered adapters
    pub fn adapter_names(&self) -> impl Iterator<Item = &str> {
        self.adapters.iter().map(|a| a.name())
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("adapters", &self.adapter_names().collect::<Vec<_>>())
            .field("supertypes", &self.supertypes)
            .field("conversions", &self.table.conversion_count())
            .field("incompatible", &self.table.incompatible.len())
            .finish()
    }
}

/// Implicit numeric and vector conversions
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinConversions;

impl TypeAdapter for BuiltinConversions {
    fn name(&self) -> &str {
        "builtin"
    }

    fn register(&self, table: &mut ConversionTable) {
        use PortType as T;

        table.add_conversion(T::Int, T::Float, "int_to_float", |v| match v {
            PortValue::Int(i) => Some(PortValue::Float(*i as f32)),
            _ => None,
        });
        table.add_conversion(T::Float, T::Int, "float_to_int", |v| match v {
            PortValue::Float(f) => Some(PortValue::Int(*f as i32)),
            _ => None,
        });
        table.add_conversion(T::Float, T::Vector2, "float_to_vec2", |v| {
            v.as_float().map(|f| PortValue::Vector2([f; 2]))
        });
        table.add_conversion(T::Float, T::Vector3, "float_to_vec3", |v| {
            v.as_float().map(|f| PortValue::Vector3([f; 3]))
        });
        table.add_conversion(T::Float, T::Vector4, "float_to_vec4", |v| {
            v.as_float().map(|f| PortValue::Vector4([f; 4]))
        });
        table.add_conversion(T::Vector2, T::Vector3, "vec2_to_vec3", |v| match v {
            PortValue::Vector2([x, y]) => Some(PortValue::Vector3([*x, *y, 0.0])),
            _ => None,
        });
        table.add_conversion(T::Vector2, T::Vector4, "vec2_to_vec4", |v| match v {
            PortValue::Vector2([x, y]) => Some(PortValue::Vector4([*x, *y, 0.0, 0.0])),
            _ => None,
        });
        table.add_conversion(T::Vector3, T::Vector4, "vec3_to_vec4", |v| match v {
            PortValue::Vector3([x, y, z]) => Some(PortValue::Vector4([*x, *y, *z, 0.0])),
            _ => None,
        });
        table.add_conversion(T::Color, T::Vector4, "color_to_vec4", |v| match v {
            PortValue::Color(c) => Some(PortValue::Vector4(*c)),
            _ => None,
        });
        table.add_conversion(T::Vector4, T::Color, "vec4_to_color", |v| match v {
            PortValue::Vector4(c) => Some(PortValue::Color(*c)),
            _ => None,
        });
        for from in [T::Bool, T::Int, T::Float] {
            table.add_conversion(from, T::String, "to_string", |v| {
                Some(PortValue::String(v.to_string()))
            });
        }
    }
}

/// Lets a single value feed a list port by wrapping it
#[derive(Debug, Clone, Copy, Default)]
pub struct ListAdapter;

impl TypeAdapter for ListAdapter {
    fn name(&self) -> &str {
        "list"
    }

    fn are_assignable(&self, from: &PortType, to: &PortType) -> bool {
        match to {
            PortType::List(inner) => {
                !matches!(from, PortType::List(_) | PortType::Any)
                    && (inner.as_ref() == from || inner.is_any())
            }
            _ => false,
        }
    }

    fn adapt(&self, value: &PortValue, _to: &PortType) -> Option<PortValue> {
        Some(PortValue::List(vec![value.clone()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        TypeRegistry::builder()
            .with_defaults()
            .declare_subtype("Texture2D", PortType::Texture)
            .declare_subtype("NormalMap", PortType::Custom("Texture2D".to_string()))
            .build()
    }

    #[test]
    fn test_standard_assignability() {
        let types = registry();
        assert!(types.can_connect(&PortType::Float, &PortType::Float));
        assert!(types.can_connect(&PortType::Any, &PortType::Float));
        assert!(types.can_connect(&PortType::Exec, &PortType::Any));
        assert!(!types.can_connect(&PortType::Exec, &PortType::Float));
    }

    #[test]
    fn test_supertypes_are_transitive() {
        let types = registry();
        let normal = PortType::Custom("NormalMap".to_string());
        assert!(types.can_connect(&normal, &PortType::Texture));
        assert!(!types.can_connect(&PortType::Texture, &normal));
    }

    #[test]
    fn test_conversions() {
        let types = registry();
        assert!(types.can_connect(&PortType::Int, &PortType::Float));
        assert!(!types.can_connect(&PortType::String, &PortType::Float));
        assert_eq!(
            types.convert(&PortValue::Int(3), &PortType::Int, &PortType::Float),
            Some(PortValue::Float(3.0))
        );
        assert_eq!(
            types.convert(&PortValue::Float(2.5), &PortType::Float, &PortType::String),
            Some(PortValue::String("2.5".to_string()))
        );
    }

    #[test]
    fn test_incompatible_overrides_everything() {
        let types = TypeRegistry::builder()
            .with_defaults()
            .with_incompatible(PortType::Float, PortType::Int)
            .build();
        // Both directions, even though builtin conversions exist
        assert!(!types.can_connect(&PortType::Int, &PortType::Float));
        assert!(!types.can_connect(&PortType::Float, &PortType::Int));
        assert_eq!(types.convert(&PortValue::Int(1), &PortType::Int, &PortType::Float), None);
        // Unrelated pairs are untouched
        assert!(types.can_connect(&PortType::Float, &PortType::Vector3));
    }

    #[test]
    fn test_list_wrapping() {
        let types = registry();
        let floats = PortType::List(Box::new(PortType::Float));
        assert!(types.can_connect(&PortType::Float, &floats));
        assert!(!types.can_connect(&PortType::Bool, &floats));
        assert_eq!(
            types.convert(&PortValue::Float(1.0), &PortType::Float, &floats),
            Some(PortValue::List(vec![PortValue::Float(1.0)]))
        );
    }

    #[test]
    fn test_global_is_shared() {
        let a = TypeRegistry::global();
        let b = TypeRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.adapter_names().any(|n| n == "builtin"));
    }
}
