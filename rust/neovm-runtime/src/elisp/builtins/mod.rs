//! Built-in primitive functions.
//!
//! All functions here take pre-evaluated `Vec<Value>` arguments and return
//! `EvalResult`. The evaluator dispatches here after evaluating the argument
//! expressions; the function cell of each builtin holds `Value::Subr(name)`.

pub(super) use super::error::{signal, wrong_type, EvalResult, Flow};
pub(super) use super::eval::Evaluator;
pub(super) use super::intern::{intern, resolve_sym, SymId};
pub(super) use super::value::*;
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use super::symbol::Obarray;

mod arithmetic;
pub(crate) mod buffers;
mod cons_list;
mod frames;
mod higher_order;
mod misc_eval;
pub(crate) mod strings;
mod symbols;
mod types;

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn arity_error(name: &str, args: &[Value]) -> Flow {
    signal(
        "wrong-number-of-arguments",
        vec![Value::symbol(name), Value::Int(args.len() as i64)],
    )
}

/// Expect exactly N arguments.
pub(super) fn expect_args(name: &str, args: &[Value], n: usize) -> Result<(), Flow> {
    if args.len() != n {
        Err(arity_error(name, args))
    } else {
        Ok(())
    }
}

/// Expect at least N arguments.
pub(super) fn expect_min_args(name: &str, args: &[Value], min: usize) -> Result<(), Flow> {
    if args.len() < min {
        Err(arity_error(name, args))
    } else {
        Ok(())
    }
}

pub(super) fn expect_range_args(
    name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), Flow> {
    if args.len() < min || args.len() > max {
        Err(arity_error(name, args))
    } else {
        Ok(())
    }
}

/// Extract an integer, signaling wrong-type-argument if not.
pub(super) fn expect_int(value: &Value) -> Result<i64, Flow> {
    value.as_int().ok_or_else(|| wrong_type("integerp", value.clone()))
}

pub(super) fn expect_symbol(value: &Value) -> Result<SymId, Flow> {
    value
        .as_symbol_id()
        .ok_or_else(|| wrong_type("symbolp", value.clone()))
}

pub(super) fn expect_string(value: &Value) -> Result<String, Flow> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| wrong_type("stringp", value.clone()))
}

/// The elements of a proper list.
pub(super) fn expect_list(value: &Value) -> Result<Vec<Value>, Flow> {
    list_to_vec(value).ok_or_else(|| wrong_type("listp", value.clone()))
}

/// Optional argument `idx`, nil when absent.
pub(super) fn arg_or_nil(args: &[Value], idx: usize) -> Value {
    args.get(idx).cloned().unwrap_or(Value::Nil)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter)]
pub(crate) enum BuiltinId {
    // Arithmetic
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Rem,
    #[strum(serialize = "mod")]
    Mod,
    #[strum(serialize = "1+")]
    Add1,
    #[strum(serialize = "1-")]
    Sub1,
    #[strum(serialize = "=")]
    NumEq,
    #[strum(serialize = "/=")]
    NumNe,
    #[strum(serialize = "<")]
    NumLt,
    #[strum(serialize = "<=")]
    NumLe,
    #[strum(serialize = ">")]
    NumGt,
    #[strum(serialize = ">=")]
    NumGe,
    #[strum(serialize = "max")]
    Max,
    #[strum(serialize = "min")]
    Min,
    #[strum(serialize = "abs")]
    Abs,

    // Types and equality
    #[strum(serialize = "null")]
    Null,
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "atom")]
    Atom,
    #[strum(serialize = "consp")]
    Consp,
    #[strum(serialize = "listp")]
    Listp,
    #[strum(serialize = "nlistp")]
    Nlistp,
    #[strum(serialize = "symbolp")]
    Symbolp,
    #[strum(serialize = "keywordp")]
    Keywordp,
    #[strum(serialize = "stringp")]
    Stringp,
    #[strum(serialize = "integerp")]
    Integerp,
    #[strum(serialize = "numberp")]
    Numberp,
    #[strum(serialize = "floatp")]
    Floatp,
    #[strum(serialize = "functionp")]
    Functionp,
    #[strum(serialize = "subrp")]
    Subrp,
    #[strum(serialize = "bufferp")]
    Bufferp,
    #[strum(serialize = "framep")]
    Framep,
    #[strum(serialize = "type-of")]
    TypeOf,
    #[strum(serialize = "eq")]
    Eq,
    #[strum(serialize = "eql")]
    Eql,
    #[strum(serialize = "equal")]
    Equal,

    // Conses and lists
    #[strum(serialize = "car")]
    Car,
    #[strum(serialize = "cdr")]
    Cdr,
    #[strum(serialize = "car-safe")]
    CarSafe,
    #[strum(serialize = "cdr-safe")]
    CdrSafe,
    #[strum(serialize = "caar")]
    Caar,
    #[strum(serialize = "cadr")]
    Cadr,
    #[strum(serialize = "cdar")]
    Cdar,
    #[strum(serialize = "cddr")]
    Cddr,
    #[strum(serialize = "cons")]
    Cons,
    #[strum(serialize = "list")]
    List,
    #[strum(serialize = "length")]
    Length,
    #[strum(serialize = "nth")]
    Nth,
    #[strum(serialize = "nthcdr")]
    Nthcdr,
    #[strum(serialize = "append")]
    Append,
    #[strum(serialize = "reverse")]
    Reverse,
    #[strum(serialize = "nreverse")]
    Nreverse,
    #[strum(serialize = "memq")]
    Memq,
    #[strum(serialize = "member")]
    Member,
    #[strum(serialize = "assq")]
    Assq,
    #[strum(serialize = "assoc")]
    Assoc,
    #[strum(serialize = "delq")]
    Delq,
    #[strum(serialize = "delete")]
    Delete,
    #[strum(serialize = "last")]
    Last,
    #[strum(serialize = "nconc")]
    Nconc,
    #[strum(serialize = "setcar")]
    Setcar,
    #[strum(serialize = "setcdr")]
    Setcdr,
    #[strum(serialize = "plist-get")]
    PlistGet,
    #[strum(serialize = "plist-put")]
    PlistPut,
    #[strum(serialize = "copy-sequence")]
    CopySequence,

    // Strings and output
    #[strum(serialize = "format")]
    Format,
    #[strum(serialize = "format-message")]
    FormatMessage,
    #[strum(serialize = "message")]
    Message,
    #[strum(serialize = "concat")]
    Concat,
    #[strum(serialize = "string=")]
    StringEq,
    #[strum(serialize = "string-equal")]
    StringEqual,
    #[strum(serialize = "symbol-name")]
    SymbolName,
    #[strum(serialize = "intern")]
    Intern,
    #[strum(serialize = "number-to-string")]
    NumberToString,
    #[strum(serialize = "prin1-to-string")]
    Prin1ToString,

    // Mapping
    #[strum(serialize = "mapcar")]
    Mapcar,
    #[strum(serialize = "mapc")]
    Mapc,
    #[strum(serialize = "mapconcat")]
    Mapconcat,

    // Variables
    #[strum(serialize = "symbol-value")]
    SymbolValue,
    #[strum(serialize = "set")]
    Set,
    #[strum(serialize = "boundp")]
    Boundp,
    #[strum(serialize = "makunbound")]
    Makunbound,
    #[strum(serialize = "default-value")]
    DefaultValue,
    #[strum(serialize = "default-boundp")]
    DefaultBoundp,
    #[strum(serialize = "set-default")]
    SetDefault,
    #[strum(serialize = "make-variable-buffer-local")]
    MakeVariableBufferLocal,
    #[strum(serialize = "make-local-variable")]
    MakeLocalVariable,
    #[strum(serialize = "kill-local-variable")]
    KillLocalVariable,
    #[strum(serialize = "make-variable-frame-local")]
    MakeVariableFrameLocal,
    #[strum(serialize = "local-variable-p")]
    LocalVariableP,
    #[strum(serialize = "local-variable-if-set-p")]
    LocalVariableIfSetP,
    #[strum(serialize = "variable-binding-locus")]
    VariableBindingLocus,
    #[strum(serialize = "buffer-local-value")]
    BufferLocalValue,
    #[strum(serialize = "buffer-local-variables")]
    BufferLocalVariables,
    #[strum(serialize = "defvaralias")]
    Defvaralias,
    #[strum(serialize = "indirect-variable")]
    IndirectVariable,
    #[strum(serialize = "special-variable-p")]
    SpecialVariableP,
    #[strum(serialize = "default-toplevel-value")]
    DefaultToplevelValue,
    #[strum(serialize = "set-default-toplevel-value")]
    SetDefaultToplevelValue,

    // Function cells and property lists
    #[strum(serialize = "fset")]
    Fset,
    #[strum(serialize = "defalias")]
    Defalias,
    #[strum(serialize = "fboundp")]
    Fboundp,
    #[strum(serialize = "fmakunbound")]
    Fmakunbound,
    #[strum(serialize = "symbol-function")]
    SymbolFunction,
    #[strum(serialize = "indirect-function")]
    IndirectFunction,
    #[strum(serialize = "get")]
    Get,
    #[strum(serialize = "put")]
    Put,
    #[strum(serialize = "symbol-plist")]
    SymbolPlist,

    // Evaluation and non-local exits
    #[strum(serialize = "signal")]
    Signal,
    #[strum(serialize = "error")]
    Error,
    #[strum(serialize = "user-error")]
    UserError,
    #[strum(serialize = "throw")]
    Throw,
    #[strum(serialize = "funcall")]
    Funcall,
    #[strum(serialize = "apply")]
    Apply,
    #[strum(serialize = "eval")]
    Eval,
    #[strum(serialize = "error-message-string")]
    ErrorMessageString,
    #[strum(serialize = "macroexpand")]
    Macroexpand,
    #[strum(serialize = "macroexpand-1")]
    Macroexpand1,
    #[strum(serialize = "identity")]
    Identity,
    #[strum(serialize = "ignore")]
    Ignore,
    #[strum(serialize = "define-error")]
    DefineError,
    #[strum(serialize = "debug")]
    Debug,

    // Buffers
    #[strum(serialize = "current-buffer")]
    CurrentBuffer,
    #[strum(serialize = "set-buffer")]
    SetBuffer,
    #[strum(serialize = "get-buffer-create")]
    GetBufferCreate,
    #[strum(serialize = "get-buffer")]
    GetBuffer,
    #[strum(serialize = "buffer-name")]
    BufferName,
    #[strum(serialize = "buffer-list")]
    BufferList,
    #[strum(serialize = "kill-buffer")]
    KillBuffer,
    #[strum(serialize = "buffer-live-p")]
    BufferLiveP,

    // Frames
    #[strum(serialize = "selected-frame")]
    SelectedFrame,
    #[strum(serialize = "make-frame")]
    MakeFrame,
    #[strum(serialize = "select-frame")]
    SelectFrame,
    #[strum(serialize = "frame-parameter")]
    FrameParameter,
    #[strum(serialize = "frame-parameters")]
    FrameParameters,
    #[strum(serialize = "modify-frame-parameters")]
    ModifyFrameParameters,
    #[strum(serialize = "frame-live-p")]
    FrameLiveP,
    #[strum(serialize = "frame-list")]
    FrameList,
    #[strum(serialize = "frame-terminal")]
    FrameTerminal,

    // Hooks
    #[strum(serialize = "run-hooks")]
    RunHooks,
    #[strum(serialize = "run-hook-with-args")]
    RunHookWithArgs,
    #[strum(serialize = "run-hook-with-args-until-success")]
    RunHookWithArgsUntilSuccess,
    #[strum(serialize = "run-hook-with-args-until-failure")]
    RunHookWithArgsUntilFailure,
    #[strum(serialize = "run-hook-wrapped")]
    RunHookWrapped,
    #[strum(serialize = "add-hook")]
    AddHook,
    #[strum(serialize = "remove-hook")]
    RemoveHook,

    // Autoload and files
    #[strum(serialize = "autoload")]
    Autoload,
    #[strum(serialize = "autoload-do-load")]
    AutoloadDoLoad,
    #[strum(serialize = "autoloadp")]
    Autoloadp,
    #[strum(serialize = "load")]
    Load,
    #[strum(serialize = "provide")]
    Provide,
    #[strum(serialize = "require")]
    Require,
    #[strum(serialize = "featurep")]
    Featurep,
}

impl BuiltinId {
    pub(crate) fn name(self) -> &'static str {
        self.into()
    }
}

/// Point the function cell of every builtin at its subr.
pub(crate) fn install(obarray: &mut Obarray) {
    for id in BuiltinId::iter() {
        let sym = intern(id.name());
        obarray.set_symbol_function(sym, Some(Value::Subr(sym)));
    }
    tracing::trace!(count = BuiltinId::iter().count(), "installed builtins");
}

/// Call the builtin named `function`.
pub(crate) fn call(eval: &mut Evaluator, function: SymId, args: Vec<Value>) -> EvalResult {
    match resolve_sym(function).parse::<BuiltinId>() {
        Ok(id) => dispatch(eval, id, args),
        Err(_) => Err(signal("void-function", vec![Value::from_sym(function)])),
    }
}

fn dispatch(eval: &mut Evaluator, id: BuiltinId, args: Vec<Value>) -> EvalResult {
    use BuiltinId as B;
    match id {
        B::Add => arithmetic::builtin_add(args),
        B::Sub => arithmetic::builtin_sub(args),
        B::Mul => arithmetic::builtin_mul(args),
        B::Div => arithmetic::builtin_div(args),
        B::Rem => arithmetic::builtin_rem(args),
        B::Mod => arithmetic::builtin_mod(args),
        B::Add1 => arithmetic::builtin_add1(args),
        B::Sub1 => arithmetic::builtin_sub1(args),
        B::NumEq => arithmetic::builtin_compare("=", args),
        B::NumNe => arithmetic::builtin_compare("/=", args),
        B::NumLt => arithmetic::builtin_compare("<", args),
        B::NumLe => arithmetic::builtin_compare("<=", args),
        B::NumGt => arithmetic::builtin_compare(">", args),
        B::NumGe => arithmetic::builtin_compare(">=", args),
        B::Max => arithmetic::builtin_max(args),
        B::Min => arithmetic::builtin_min(args),
        B::Abs => arithmetic::builtin_abs(args),

        B::Null | B::Not => types::builtin_null(args),
        B::Atom => types::builtin_atom(args),
        B::Consp => types::builtin_consp(args),
        B::Listp => types::builtin_listp(args),
        B::Nlistp => types::builtin_nlistp(args),
        B::Symbolp => types::builtin_symbolp(args),
        B::Keywordp => types::builtin_keywordp(args),
        B::Stringp => types::builtin_stringp(args),
        B::Integerp => types::builtin_integerp(args),
        B::Numberp => types::builtin_numberp(args),
        B::Floatp => types::builtin_floatp(args),
        B::Functionp => types::builtin_functionp(eval, args),
        B::Subrp => types::builtin_subrp(args),
        B::Bufferp => types::builtin_bufferp(args),
        B::Framep => types::builtin_framep(args),
        B::TypeOf => types::builtin_type_of(args),
        B::Eq => types::builtin_eq(args),
        B::Eql => types::builtin_eql(args),
        B::Equal => types::builtin_equal(args),

        B::Car => cons_list::builtin_car(args),
        B::Cdr => cons_list::builtin_cdr(args),
        B::CarSafe => cons_list::builtin_car_safe(args),
        B::CdrSafe => cons_list::builtin_cdr_safe(args),
        B::Caar => cons_list::builtin_cxr("caar", args, &[true, true]),
        B::Cadr => cons_list::builtin_cxr("cadr", args, &[false, true]),
        B::Cdar => cons_list::builtin_cxr("cdar", args, &[true, false]),
        B::Cddr => cons_list::builtin_cxr("cddr", args, &[false, false]),
        B::Cons => cons_list::builtin_cons(args),
        B::List => Ok(Value::list(args)),
        B::Length => cons_list::builtin_length(args),
        B::Nth => cons_list::builtin_nth(args),
        B::Nthcdr => cons_list::builtin_nthcdr(args),
        B::Append => cons_list::builtin_append(args),
        B::Reverse => cons_list::builtin_reverse(args),
        B::Nreverse => cons_list::builtin_nreverse(args),
        B::Memq => cons_list::builtin_memq(args),
        B::Member => cons_list::builtin_member(args),
        B::Assq => cons_list::builtin_assq(args),
        B::Assoc => cons_list::builtin_assoc(args),
        B::Delq => cons_list::builtin_delq(args),
        B::Delete => cons_list::builtin_delete(args),
        B::Last => cons_list::builtin_last(args),
        B::Nconc => cons_list::builtin_nconc(args),
        B::Setcar => cons_list::builtin_setcar(args),
        B::Setcdr => cons_list::builtin_setcdr(args),
        B::PlistGet => cons_list::builtin_plist_get(args),
        B::PlistPut => cons_list::builtin_plist_put(args),
        B::CopySequence => cons_list::builtin_copy_sequence(args),

        B::Format | B::FormatMessage => strings::builtin_format(args),
        B::Message => strings::builtin_message(eval, args),
        B::Concat => strings::builtin_concat(args),
        B::StringEq | B::StringEqual => strings::builtin_string_equal(args),
        B::SymbolName => strings::builtin_symbol_name(args),
        B::Intern => strings::builtin_intern(args),
        B::NumberToString => strings::builtin_number_to_string(args),
        B::Prin1ToString => strings::builtin_prin1_to_string(args),

        B::Mapcar => higher_order::builtin_mapcar(eval, args),
        B::Mapc => higher_order::builtin_mapc(eval, args),
        B::Mapconcat => higher_order::builtin_mapconcat(eval, args),

        B::SymbolValue => symbols::builtin_symbol_value(eval, args),
        B::Set => symbols::builtin_set(eval, args),
        B::Boundp => symbols::builtin_boundp(eval, args),
        B::Makunbound => symbols::builtin_makunbound(eval, args),
        B::DefaultValue => symbols::builtin_default_value(eval, args),
        B::DefaultBoundp => symbols::builtin_default_boundp(eval, args),
        B::SetDefault => symbols::builtin_set_default(eval, args),
        B::MakeVariableBufferLocal => symbols::builtin_make_variable_buffer_local(eval, args),
        B::MakeLocalVariable => symbols::builtin_make_local_variable(eval, args),
        B::KillLocalVariable => symbols::builtin_kill_local_variable(eval, args),
        B::MakeVariableFrameLocal => symbols::builtin_make_variable_frame_local(eval, args),
        B::LocalVariableP => symbols::builtin_local_variable_p(eval, args),
        B::LocalVariableIfSetP => symbols::builtin_local_variable_if_set_p(eval, args),
        B::VariableBindingLocus => symbols::builtin_variable_binding_locus(eval, args),
        B::BufferLocalValue => symbols::builtin_buffer_local_value(eval, args),
        B::BufferLocalVariables => symbols::builtin_buffer_local_variables(eval, args),
        B::Defvaralias => symbols::builtin_defvaralias(eval, args),
        B::IndirectVariable => symbols::builtin_indirect_variable(eval, args),
        B::SpecialVariableP => symbols::builtin_special_variable_p(eval, args),
        B::DefaultToplevelValue => symbols::builtin_default_toplevel_value(eval, args),
        B::SetDefaultToplevelValue => symbols::builtin_set_default_toplevel_value(eval, args),

        B::Fset => symbols::builtin_fset(eval, args),
        B::Defalias => symbols::builtin_defalias(eval, args),
        B::Fboundp => symbols::builtin_fboundp(eval, args),
        B::Fmakunbound => symbols::builtin_fmakunbound(eval, args),
        B::SymbolFunction => symbols::builtin_symbol_function(eval, args),
        B::IndirectFunction => symbols::builtin_indirect_function(eval, args),
        B::Get => symbols::builtin_get(eval, args),
        B::Put => symbols::builtin_put(eval, args),
        B::SymbolPlist => symbols::builtin_symbol_plist(eval, args),

        B::Signal => misc_eval::builtin_signal(eval, args),
        B::Error => misc_eval::builtin_error(eval, "error", args),
        B::UserError => misc_eval::builtin_error(eval, "user-error", args),
        B::Throw => misc_eval::builtin_throw(eval, args),
        B::Funcall => misc_eval::builtin_funcall(eval, args),
        B::Apply => misc_eval::builtin_apply(eval, args),
        B::Eval => misc_eval::builtin_eval(eval, args),
        B::ErrorMessageString => misc_eval::builtin_error_message_string(eval, args),
        B::Macroexpand => misc_eval::builtin_macroexpand(eval, args),
        B::Macroexpand1 => misc_eval::builtin_macroexpand_1(eval, args),
        B::Identity => {
            expect_args("identity", &args, 1)?;
            Ok(args[0].clone())
        }
        B::Ignore => Ok(Value::Nil),
        B::DefineError => misc_eval::builtin_define_error(eval, args),
        B::Debug => eval.call_debugger(Value::list(args)),

        B::CurrentBuffer => buffers::builtin_current_buffer(eval, args),
        B::SetBuffer => buffers::builtin_set_buffer(eval, args),
        B::GetBufferCreate => buffers::builtin_get_buffer_create(eval, args),
        B::GetBuffer => buffers::builtin_get_buffer(eval, args),
        B::BufferName => buffers::builtin_buffer_name(eval, args),
        B::BufferList => buffers::builtin_buffer_list(eval, args),
        B::KillBuffer => buffers::builtin_kill_buffer(eval, args),
        B::BufferLiveP => buffers::builtin_buffer_live_p(eval, args),

        B::SelectedFrame => frames::builtin_selected_frame(eval, args),
        B::MakeFrame => frames::builtin_make_frame(eval, args),
        B::SelectFrame => frames::builtin_select_frame(eval, args),
        B::FrameParameter => frames::builtin_frame_parameter(eval, args),
        B::FrameParameters => frames::builtin_frame_parameters(eval, args),
        B::ModifyFrameParameters => frames::builtin_modify_frame_parameters(eval, args),
        B::FrameLiveP => frames::builtin_frame_live_p(eval, args),
        B::FrameList => frames::builtin_frame_list(eval, args),
        B::FrameTerminal => frames::builtin_frame_terminal(eval, args),

        B::RunHooks => super::hooks::builtin_run_hooks(eval, args),
        B::RunHookWithArgs => super::hooks::builtin_run_hook_with_args(eval, args),
        B::RunHookWithArgsUntilSuccess => {
            super::hooks::builtin_run_hook_with_args_until_success(eval, args)
        }
        B::RunHookWithArgsUntilFailure => {
            super::hooks::builtin_run_hook_with_args_until_failure(eval, args)
        }
        B::RunHookWrapped => super::hooks::builtin_run_hook_wrapped(eval, args),
        B::AddHook => super::hooks::builtin_add_hook(eval, args),
        B::RemoveHook => super::hooks::builtin_remove_hook(eval, args),

        B::Autoload => super::autoload::builtin_autoload(eval, args),
        B::AutoloadDoLoad => super::autoload::builtin_autoload_do_load(eval, args),
        B::Autoloadp => super::autoload::builtin_autoloadp(args),
        B::Load => super::load::builtin_load(eval, args),
        B::Provide => super::load::builtin_provide(eval, args),
        B::Require => super::load::builtin_require(eval, args),
        B::Featurep => super::load::builtin_featurep(eval, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn every_builtin_name_parses_back() {
        for id in BuiltinId::iter() {
            assert_eq!(BuiltinId::from_str(id.name()), Ok(id));
        }
    }

    #[test]
    fn installed_builtins_are_subrs_named_after_themselves() {
        let mut obarray = Obarray::new();
        install(&mut obarray);
        assert_eq!(
            obarray.symbol_function(intern("car")),
            Some(Value::Subr(intern("car")))
        );
        assert_eq!(
            obarray.symbol_function(intern("run-hook-with-args-until-success")),
            Some(Value::Subr(intern("run-hook-with-args-until-success")))
        );
    }

    #[test]
    fn unknown_subr_is_void() {
        let mut ev = Evaluator::new();
        let result = call(&mut ev, intern("no-such-builtin"), vec![]);
        assert!(matches!(result, Err(Flow::Signal(_))));
    }
}
