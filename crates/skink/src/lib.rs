#![doc = include_str!("../../../README.md")]

mod ast;
mod builtins;
mod context;
mod env;
mod error;
mod exception;
mod heap;
pub mod host;
mod intern;
mod interp;
mod io;
mod jsvalue;
mod lex;
mod linked_map;
mod object;
mod ops;
mod parse;
mod prepare;
mod report;
mod resource;
mod value;

pub use crate::{
    context::{Context, Scope, Script},
    error::ErrorKind,
    exception::{CodeLoc, Exception, StackFrame},
    host::{
        DefaultWrapFactory, HostCallCx, HostClassDescriptor, HostClassId, HostHandle, HostInterfaceId, HostIterable,
        HostIterableRef, HostIterator, HostList, HostListRef, HostRegistry, HostType, HostValue, ScriptCallback,
        ScriptValue, TypeWrapper, TypeWrappers, VecIterator, WrapFactory,
    },
    io::{CollectStringConsole, ConsoleLevel, ConsoleWriter, NoConsole, StdConsole},
    jsvalue::JsValue,
    report::{CollectingReporter, Diagnostic, ErrorReporter},
    resource::{
        DEFAULT_MAX_CALL_DEPTH, LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker,
    },
};
