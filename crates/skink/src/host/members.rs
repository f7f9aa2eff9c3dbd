//! Synthesis of reflective member tables for host classes.
//!
//! Fields become data members, methods collapse into overload sets under
//! one name, and JavaBean accessor pairs (`getX`/`isX` plus optional
//! `setX`) additionally surface as a property `x`. The embedder's name
//! remap hook runs before anything enters the tables, and configured
//! prefixes are stripped before the bean rule applies.

use std::rc::Rc;

use ahash::AHashMap;
use smallvec::SmallVec;

use super::{HostClass, HostType};

/// What a member name resolves to on a host class.
#[derive(Debug, Clone)]
pub(crate) enum MemberEntry {
    /// Index into the class's field list.
    Field(usize),
    /// Indices into the class's method list forming the overload set.
    Methods(SmallVec<[usize; 2]>),
    /// A synthesized bean property: zero-arg getter, optional one-arg
    /// setter, both indices into the method list.
    BeanProp { getter: usize, setter: Option<usize> },
}

/// Instance and static member tables of a host class.
#[derive(Debug, Default)]
pub(crate) struct Members {
    pub instance: AHashMap<Rc<str>, MemberEntry>,
    pub statics: AHashMap<Rc<str>, MemberEntry>,
}

impl Members {
    pub fn get(&self, name: &str, is_static: bool) -> Option<&MemberEntry> {
        if is_static {
            self.statics.get(name)
        } else {
            self.instance.get(name)
        }
    }
}

pub(crate) fn build_members(
    class: &HostClass,
    remap: Option<&dyn Fn(&str) -> Option<String>>,
    bean_prefixes: &[String],
) -> Members {
    let mut members = Members::default();

    let apply_remap = |name: &str| -> Rc<str> {
        match remap.and_then(|f| f(name)) {
            Some(renamed) => Rc::from(renamed),
            None => Rc::from(name),
        }
    };

    for (index, field) in class.fields.iter().enumerate() {
        let table = if field.is_static {
            &mut members.statics
        } else {
            &mut members.instance
        };
        table.insert(apply_remap(&field.name), MemberEntry::Field(index));
    }

    for (index, method) in class.methods.iter().enumerate() {
        let name = apply_remap(&method.name);
        let table = if method.is_static {
            &mut members.statics
        } else {
            &mut members.instance
        };
        match table.get_mut(&name) {
            Some(MemberEntry::Methods(set)) => set.push(index),
            // A field and a method under one name: the method wins, matching
            // the original engine's shadowing order.
            _ => {
                let mut set = SmallVec::new();
                set.push(index);
                table.insert(name, MemberEntry::Methods(set));
            }
        }
    }

    synthesize_beans(class, &mut members, remap, bean_prefixes, false);
    synthesize_beans(class, &mut members, remap, bean_prefixes, true);

    members
}

/// Adds `x` entries for `getX()`/`isX()` (+ optional `setX(v)`) pairs.
fn synthesize_beans(
    class: &HostClass,
    members: &mut Members,
    remap: Option<&dyn Fn(&str) -> Option<String>>,
    bean_prefixes: &[String],
    statics: bool,
) {
    let apply_remap = |name: &str| -> String {
        remap.and_then(|f| f(name)).unwrap_or_else(|| name.to_owned())
    };

    let mut props: Vec<(String, usize, Option<usize>)> = Vec::new();
    for (index, method) in class.methods.iter().enumerate() {
        if method.is_static != statics {
            continue;
        }
        let name = apply_remap(&method.name);
        let stripped = strip_prefixes(&name, bean_prefixes);
        let Some(prop) = bean_property_name(stripped, &["get", "is"]) else {
            continue;
        };
        if !method.params.is_empty() {
            continue;
        }
        // Find a matching one-argument setter in the same table.
        let setter = class.methods.iter().enumerate().position(|(_, m)| {
            m.is_static == statics
                && m.params.len() == 1
                && bean_property_name(strip_prefixes(&apply_remap(&m.name), bean_prefixes), &["set"])
                    .is_some_and(|p| p == prop)
        });
        props.push((prop, index, setter));
    }

    let table = if statics { &mut members.statics } else { &mut members.instance };
    for (prop, getter, setter) in props {
        // A real field or method with the property's name keeps priority.
        if table.contains_key(prop.as_str()) {
            continue;
        }
        table.insert(Rc::from(prop), MemberEntry::BeanProp { getter, setter });
    }
}

fn strip_prefixes<'n>(name: &'n str, prefixes: &[String]) -> &'n str {
    for prefix in prefixes {
        if let Some(rest) = name.strip_prefix(prefix.as_str()) {
            return rest;
        }
    }
    name
}

/// `getName` with accessor prefixes `["get", "is"]` yields `name`.
fn bean_property_name(method_name: &str, accessor_prefixes: &[&str]) -> Option<String> {
    for prefix in accessor_prefixes {
        if let Some(rest) = method_name.strip_prefix(prefix) {
            let mut chars = rest.chars();
            let first = chars.next()?;
            if !first.is_uppercase() {
                continue;
            }
            let mut prop = String::new();
            prop.extend(first.to_lowercase());
            prop.push_str(chars.as_str());
            return Some(prop);
        }
    }
    None
}

/// Declared parameter lists of an overload set, for diagnostics.
pub(crate) fn describe_overloads(class: &HostClass, set: &[usize]) -> String {
    let mut out = String::new();
    for (i, &index) in set.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let method = &class.methods[index];
        out.push_str(&method.name);
        out.push('(');
        for (j, param) in method.params.iter().enumerate() {
            if j > 0 {
                out.push_str(", ");
            }
            out.push_str(type_name(param));
        }
        out.push(')');
    }
    out
}

pub(crate) fn type_name(ty: &HostType) -> &'static str {
    match ty {
        HostType::Bool => "boolean",
        HostType::Byte => "byte",
        HostType::Short => "short",
        HostType::Int => "int",
        HostType::Long => "long",
        HostType::Float => "float",
        HostType::Double => "double",
        HostType::Char => "char",
        HostType::String => "String",
        HostType::Any => "Object",
        HostType::Class(_) => "class",
        HostType::Interface(_) => "interface",
        HostType::Array(_) => "array",
    }
}
