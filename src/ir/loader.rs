// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Loads a program from its JSON description.
//!
//! Entities are referenced by name: types by their name, methods by
//! `Type.method`, variables by their name inside the enclosing method.
//! Variables are declared implicitly on first use.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::*;
use serde::Deserialize;
use thiserror::Error;

use super::builder::ProgramBuilder;
use super::program::{CallKind, MethodId, Program, Subsignature, TypeId, VarId};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Duplicate type: {0}")]
    DuplicateType(String),

    #[error("Duplicate method: {0}")]
    DuplicateMethod(String),

    #[error("Method {0} cannot be both static and abstract")]
    StaticAbstractMethod(String),

    #[error("Abstract method {0} has a body")]
    AbstractMethodWithBody(String),

    #[error("Cyclic inheritance involving type {0}")]
    CyclicInheritance(String),

    #[error("No entry method specified")]
    NoEntry,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramDesc {
    pub types: Vec<TypeDesc>,
    #[serde(default)]
    pub entries: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDesc {
    pub name: String,
    #[serde(default, rename = "super")]
    pub super_type: Option<String>,
    #[serde(default)]
    pub methods: Vec<MethodDesc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodDesc {
    pub name: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub body: Vec<StmtDesc>,
}

/// A statement. Unknown `kind`s and missing operands are rejected by serde.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StmtDesc {
    New {
        var: String,
        #[serde(rename = "type")]
        ty: String,
    },
    Assign {
        to: String,
        from: String,
    },
    Load {
        to: String,
        base: String,
        field: String,
    },
    Store {
        base: String,
        field: String,
        from: String,
    },
    Call {
        call: CallKind,
        target: String,
        #[serde(default)]
        receiver: Option<String>,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        result: Option<String>,
    },
    Return {
        var: String,
    },
}

pub fn load_program_from_file<P: AsRef<Path>>(path: P) -> Result<Program, LoadError> {
    let content = fs::read_to_string(path.as_ref())?;
    debug!("Loading program from {}", path.as_ref().display());
    load_program_from_str(&content)
}

pub fn load_program_from_str(content: &str) -> Result<Program, LoadError> {
    let desc: ProgramDesc = serde_json::from_str(content)?;
    build_program(&desc)
}

/// Turns a parsed description into a program.
pub fn build_program(desc: &ProgramDesc) -> Result<Program, LoadError> {
    let mut builder = ProgramBuilder::new();

    // Types first so that super types and call targets may be forward references.
    let mut type_ids = Vec::with_capacity(desc.types.len());
    for ty in &desc.types {
        if builder.type_id(&ty.name).is_some() {
            return Err(LoadError::DuplicateType(ty.name.clone()));
        }
        type_ids.push(builder.add_type(&ty.name, None));
    }
    for (ty, &id) in desc.types.iter().zip(&type_ids) {
        let super_type = ty.super_type.as_deref().map(|s| resolve_type(&builder, s)).transpose()?;
        builder.set_super_type(id, super_type);
    }
    check_acyclic(desc, &builder)?;

    let mut methods = Vec::new();
    for (ty, &id) in desc.types.iter().zip(&type_ids) {
        let mut declared = HashSet::new();
        for m in &ty.methods {
            if !declared.insert((m.name.as_str(), m.params.len())) {
                return Err(LoadError::DuplicateMethod(format!("{}.{}", ty.name, m.name)));
            }
            if m.is_abstract && m.is_static {
                return Err(LoadError::StaticAbstractMethod(format!("{}.{}", ty.name, m.name)));
            }
            if m.is_abstract && !m.body.is_empty() {
                return Err(LoadError::AbstractMethodWithBody(format!("{}.{}", ty.name, m.name)));
            }
            let params = m.params.iter().map(String::as_str).collect::<Vec<_>>();
            let method_id = if m.is_static {
                builder.add_static_method(id, &m.name, &params)
            } else if m.is_abstract {
                builder.add_abstract_method(id, &m.name, &params)
            } else {
                builder.add_method(id, &m.name, &params)
            };
            methods.push((method_id, m));
        }
    }

    for (method_id, m) in methods {
        for stmt in &m.body {
            add_stmt(&mut builder, method_id, stmt)?;
        }
    }

    if desc.entries.is_empty() {
        return Err(LoadError::NoEntry);
    }
    for entry in &desc.entries {
        let method = resolve_method(&builder, entry, None)?;
        builder.add_entry(method);
    }

    let program = builder.build();
    info!(
        "Loaded program: {} types, {} methods, {} allocation sites",
        desc.types.len(),
        program.num_methods(),
        program.num_alloc_sites()
    );
    Ok(program)
}

fn add_stmt(builder: &mut ProgramBuilder, method: MethodId, stmt: &StmtDesc) -> Result<(), LoadError> {
    match stmt {
        StmtDesc::New { var, ty } => {
            let ty = resolve_type(builder, ty)?;
            let var = builder.var(method, var);
            builder.new_obj(method, var, ty);
        }
        StmtDesc::Assign { to, from } => {
            let to = builder.var(method, to);
            let from = builder.var(method, from);
            builder.assign(method, to, from);
        }
        StmtDesc::Load { to, base, field } => {
            let to = builder.var(method, to);
            let base = builder.var(method, base);
            let field = builder.field(field);
            builder.load(method, to, base, field);
        }
        StmtDesc::Store { base, field, from } => {
            let base = builder.var(method, base);
            let from = builder.var(method, from);
            let field = builder.field(field);
            builder.store(method, base, field, from);
        }
        StmtDesc::Call {
            call,
            target,
            receiver,
            args,
            result,
        } => {
            let target = resolve_method(builder, target, Some(args.len()))?;
            let receiver = receiver.as_ref().map(|r| builder.var(method, r));
            let args = args.iter().map(|a| builder.var(method, a)).collect::<Vec<VarId>>();
            let result = result.as_ref().map(|r| builder.var(method, r));
            builder.call(method, *call, target, receiver, &args, result);
        }
        StmtDesc::Return { var } => {
            let var = builder.var(method, var);
            builder.ret(method, var);
        }
    }
    Ok(())
}

fn resolve_type(builder: &ProgramBuilder, name: &str) -> Result<TypeId, LoadError> {
    builder
        .type_id(name)
        .ok_or_else(|| LoadError::UnknownType(name.to_string()))
}

/// Resolves `Type.method`. Without an arity, the method must be declared
/// directly on the type with no parameters or be its only method of that name.
fn resolve_method(builder: &ProgramBuilder, qualified: &str, arity: Option<usize>) -> Result<MethodId, LoadError> {
    let unknown = || LoadError::UnknownMethod(qualified.to_string());
    let (ty_name, name) = qualified.rsplit_once('.').ok_or_else(unknown)?;
    let ty = resolve_type(builder, ty_name)?;
    let arities = match arity {
        Some(arity) => vec![arity],
        None => (0..=builder.max_arity()).collect(),
    };
    arities
        .into_iter()
        .find_map(|arity| {
            builder.lookup_method(
                ty,
                &Subsignature {
                    name: name.to_string(),
                    arity,
                },
            )
        })
        .ok_or_else(unknown)
}

fn check_acyclic(desc: &ProgramDesc, builder: &ProgramBuilder) -> Result<(), LoadError> {
    for ty in &desc.types {
        let mut seen = HashSet::new();
        let mut current = builder.type_id(&ty.name);
        while let Some(t) = current {
            if !seen.insert(t) {
                return Err(LoadError::CyclicInheritance(ty.name.clone()));
            }
            current = builder.super_type(t);
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::program::Stmt;
    use crate::ir::ProgramManager;

    const FIELD_ALIAS: &str = r#"{
        "types": [
            { "name": "O" },
            { "name": "Main", "methods": [
                { "name": "main", "static": true, "body": [
                    { "kind": "new", "var": "x", "type": "O" },
                    { "kind": "new", "var": "y", "type": "O" },
                    { "kind": "store", "base": "x", "field": "f", "from": "y" },
                    { "kind": "load", "to": "z", "base": "x", "field": "f" },
                    { "kind": "call", "call": "static", "target": "Main.id", "args": ["z"], "result": "w" }
                ]},
                { "name": "id", "static": true, "params": ["p"], "body": [
                    { "kind": "return", "var": "p" }
                ]}
            ]}
        ],
        "entries": ["Main.main"]
    }"#;

    #[test]
    fn load_simple_program() {
        let program = load_program_from_str(FIELD_ALIAS).unwrap();
        let main = program.find_method("Main.main").unwrap();
        let id = program.find_method("Main.id").unwrap();
        assert_eq!(program.entry_methods(), &[main]);
        assert_eq!(program.num_alloc_sites(), 2);
        assert_eq!(program.method(main).stmts.len(), 5);
        assert!(matches!(program.method(main).stmts[4], Stmt::Call(_)));
        let p = program.find_var(id, "p").unwrap();
        assert_eq!(program.method(id).ret_vars, vec![p]);
        let x = program.find_var(main, "x").unwrap();
        assert_eq!(program.var(x).stores.len(), 1);
        assert_eq!(program.var(x).loads.len(), 1);
    }

    #[test]
    fn inherited_call_target_resolves() {
        let src = r#"{
            "types": [
                { "name": "A", "methods": [ { "name": "m", "params": ["a"] } ] },
                { "name": "B", "super": "A" },
                { "name": "Main", "methods": [
                    { "name": "main", "static": true, "body": [
                        { "kind": "new", "var": "b", "type": "B" },
                        { "kind": "call", "call": "virtual", "target": "B.m", "receiver": "b", "args": ["b"] }
                    ]}
                ]}
            ],
            "entries": ["Main.main"]
        }"#;
        let program = load_program_from_str(src).unwrap();
        let main = program.find_method("Main.main").unwrap();
        let b = program.find_var(main, "b").unwrap();
        let cs = program.var(b).calls[0];
        assert_eq!(program.call_site(cs).target, program.find_method("A.m").unwrap());
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        let unknown_kind = r#"{ "types": [ { "name": "M", "methods": [
            { "name": "main", "static": true, "body": [ { "kind": "goto", "label": "l" } ] } ] } ],
            "entries": ["M.main"] }"#;
        assert!(matches!(load_program_from_str(unknown_kind), Err(LoadError::Json(_))));

        let unknown_type = r#"{ "types": [ { "name": "M", "methods": [
            { "name": "main", "static": true, "body": [ { "kind": "new", "var": "x", "type": "Q" } ] } ] } ],
            "entries": ["M.main"] }"#;
        assert!(matches!(load_program_from_str(unknown_type), Err(LoadError::UnknownType(_))));

        let unknown_entry = r#"{ "types": [ { "name": "M" } ], "entries": ["M.main"] }"#;
        assert!(matches!(load_program_from_str(unknown_entry), Err(LoadError::UnknownMethod(_))));

        let no_entry = r#"{ "types": [ { "name": "M" } ] }"#;
        assert!(matches!(load_program_from_str(no_entry), Err(LoadError::NoEntry)));

        let dup = r#"{ "types": [ { "name": "M" }, { "name": "M" } ], "entries": [] }"#;
        assert!(matches!(load_program_from_str(dup), Err(LoadError::DuplicateType(_))));

        let cyclic = r#"{ "types": [ { "name": "A", "super": "B" }, { "name": "B", "super": "A" } ],
            "entries": [] }"#;
        assert!(matches!(load_program_from_str(cyclic), Err(LoadError::CyclicInheritance(_))));
    }

    #[test]
    fn contradictory_method_modifiers_are_rejected() {
        let static_abstract = r#"{ "types": [ { "name": "M", "methods": [
            { "name": "main", "static": true, "abstract": true } ] } ],
            "entries": ["M.main"] }"#;
        match load_program_from_str(static_abstract) {
            Err(LoadError::StaticAbstractMethod(name)) => assert_eq!(name, "M.main"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }

        let abstract_body = r#"{ "types": [ { "name": "A", "methods": [
            { "name": "m", "abstract": true, "body": [ { "kind": "new", "var": "x", "type": "A" } ] } ] },
            { "name": "M", "methods": [ { "name": "main", "static": true } ] } ],
            "entries": ["M.main"] }"#;
        match load_program_from_str(abstract_body) {
            Err(LoadError::AbstractMethodWithBody(name)) => assert_eq!(name, "A.m"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }

        let abstract_no_body = r#"{ "types": [ { "name": "A", "methods": [
            { "name": "m", "abstract": true, "body": [] } ] },
            { "name": "M", "methods": [ { "name": "main", "static": true } ] } ],
            "entries": ["M.main"] }"#;
        assert!(load_program_from_str(abstract_no_body).is_ok());
    }
}
