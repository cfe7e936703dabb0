use super::*;
use crate::buffer::BufferId;
use crate::elisp::error::error_message;

// ===========================================================================
// Buffer arguments and the current buffer
// ===========================================================================

impl Evaluator {
    /// A buffer object argument, live or dead.
    pub(crate) fn buffer_arg(&self, value: &Value) -> Result<BufferId, Flow> {
        match value {
            Value::Buffer(id) => Ok(*id),
            other => Err(wrong_type("bufferp", other.clone())),
        }
    }

    /// An optional buffer argument; nil means the current buffer.
    pub(crate) fn optional_buffer_arg(&self, value: &Value) -> Result<Option<BufferId>, Flow> {
        match value {
            Value::Nil => Ok(None),
            other => self.buffer_arg(other).map(Some),
        }
    }

    /// A buffer or the name of an existing buffer.
    fn buffer_or_name(&self, value: &Value) -> Result<BufferId, Flow> {
        match value {
            Value::Buffer(id) => Ok(*id),
            Value::Str(name) => self
                .buffers
                .find_buffer_by_name(name)
                .ok_or_else(|| error_message(format!("No such buffer {name}"))),
            other => Err(wrong_type("stringp", other.clone())),
        }
    }

    /// Make the buffer designated by `value` current and return it.
    pub(crate) fn set_buffer(&mut self, value: &Value) -> EvalResult {
        let id = self.buffer_or_name(value)?;
        if !self.buffers.set_current(id) {
            return Err(error_message("Selecting deleted buffer"));
        }
        Ok(Value::Buffer(id))
    }

    /// Arrange for the current buffer to be restored, if it is still live,
    /// when the binding stack unwinds past this point.
    pub(crate) fn record_unwind_current_buffer(&mut self) -> Result<(), Flow> {
        let saved = self.buffers.current_id();
        self.record_unwind_protect(Box::new(move |ev| {
            ev.buffers.set_current(saved);
            Ok(())
        }))
    }

    fn buffer_list_changed(&mut self, inhibit_hooks: bool) -> Result<(), Flow> {
        if inhibit_hooks {
            return Ok(());
        }
        self.run_hook(intern("buffer-list-update-hook"))
    }
}

// ===========================================================================
// Builtins
// ===========================================================================

pub(crate) fn builtin_current_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("current-buffer", &args, 0)?;
    Ok(Value::Buffer(eval.buffers.current_id()))
}

pub(crate) fn builtin_set_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("set-buffer", &args, 1)?;
    eval.set_buffer(&args[0])
}

pub(crate) fn builtin_get_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("get-buffer", &args, 1)?;
    match &args[0] {
        Value::Buffer(_) => Ok(args[0].clone()),
        Value::Str(name) => Ok(eval
            .buffers
            .find_buffer_by_name(name)
            .map_or(Value::Nil, Value::Buffer)),
        other => Err(wrong_type("stringp", other.clone())),
    }
}

/// `(get-buffer-create BUFFER-OR-NAME &optional INHIBIT-BUFFER-HOOKS)`
pub(crate) fn builtin_get_buffer_create(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("get-buffer-create", &args, 1, 2)?;
    let name = match &args[0] {
        Value::Buffer(_) => return Ok(args[0].clone()),
        Value::Str(name) => name.to_string(),
        other => return Err(wrong_type("stringp", other.clone())),
    };
    if let Some(id) = eval.buffers.find_buffer_by_name(&name) {
        return Ok(Value::Buffer(id));
    }
    if name.is_empty() {
        return Err(error_message("Empty string for buffer name is not allowed"));
    }
    let id = eval.buffers.create_buffer(&name);
    eval.buffer_list_changed(arg_or_nil(&args, 1).is_truthy())?;
    Ok(Value::Buffer(id))
}

pub(crate) fn builtin_buffer_name(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("buffer-name", &args, 0, 1)?;
    let id = eval
        .optional_buffer_arg(&arg_or_nil(&args, 0))?
        .unwrap_or_else(|| eval.buffers.current_id());
    Ok(eval
        .buffers
        .get(id)
        .map_or(Value::Nil, |b| Value::string(b.name.clone())))
}

pub(crate) fn builtin_buffer_list(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("buffer-list", &args, 0, 1)?;
    Ok(Value::list(
        eval.buffers.ids().into_iter().map(Value::Buffer).collect(),
    ))
}

pub(crate) fn builtin_buffer_live_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("buffer-live-p", &args, 1)?;
    Ok(Value::bool(
        matches!(&args[0], Value::Buffer(id) if eval.buffers.is_live(*id)),
    ))
}

/// `(kill-buffer &optional BUFFER-OR-NAME)`. `kill-buffer-hook` runs with
/// the doomed buffer current. Returns nil for a dead buffer or when the
/// buffer is the only one left.
pub(crate) fn builtin_kill_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("kill-buffer", &args, 0, 1)?;
    let id = match arg_or_nil(&args, 0) {
        Value::Nil => eval.buffers.current_id(),
        other => eval.buffer_or_name(&other)?,
    };
    if !eval.buffers.is_live(id) {
        return Ok(Value::Nil);
    }
    let count = eval.specpdl_depth();
    eval.record_unwind_current_buffer()?;
    eval.buffers.set_current(id);
    let hook = eval.run_hook(intern("kill-buffer-hook")).map(|()| Value::Nil);
    eval.unbind_to_with(count, hook)?;
    if !eval.buffers.kill_buffer(id) {
        return Ok(Value::Nil);
    }
    eval.buffer_list_changed(false)?;
    Ok(Value::True)
}

#[cfg(test)]
mod tests {
    use crate::elisp::tests_support::{eval_all, eval_one};

    #[test]
    fn get_buffer_create_reuses_existing_buffers() {
        let results = eval_all(
            "(setq b (get-buffer-create \"work\"))
             (eq b (get-buffer-create \"work\"))
             (eq b (get-buffer \"work\"))
             (buffer-name b)
             (get-buffer \"missing\")
             (length (buffer-list))
             (get-buffer-create \"\")",
        );
        assert_eq!(results[1], "OK t");
        assert_eq!(results[2], "OK t");
        assert_eq!(results[3], "OK \"work\"");
        assert_eq!(results[4], "OK nil");
        assert_eq!(results[5], "OK 2");
        assert_eq!(
            results[6],
            "ERR (error \"Empty string for buffer name is not allowed\")"
        );
    }

    #[test]
    fn set_buffer_accepts_names_and_rejects_dead_buffers() {
        let results = eval_all(
            "(get-buffer-create \"named\")
             (progn (set-buffer \"named\") (buffer-name))
             (set-buffer \"nope\")
             (setq doomed (get-buffer-create \"doomed\"))
             (kill-buffer doomed)
             (buffer-live-p doomed)
             (buffer-name doomed)
             (set-buffer doomed)",
        );
        assert_eq!(results[1], "OK \"named\"");
        assert_eq!(results[2], "ERR (error \"No such buffer nope\")");
        assert_eq!(results[4], "OK t");
        assert_eq!(results[5], "OK nil");
        assert_eq!(results[6], "OK nil");
        assert_eq!(results[7], "ERR (error \"Selecting deleted buffer\")");
    }

    #[test]
    fn save_current_buffer_restores_after_errors() {
        let results = eval_all(
            "(setq other (get-buffer-create \"other\"))
             (condition-case nil
                 (save-current-buffer (set-buffer other) (car 1))
               (error (buffer-name)))
             (with-current-buffer other (buffer-name))
             (buffer-name)",
        );
        assert_eq!(results[1], "OK \"*scratch*\"");
        assert_eq!(results[2], "OK \"other\"");
        assert_eq!(results[3], "OK \"*scratch*\"");
    }

    #[test]
    fn kill_buffer_hook_runs_inside_the_buffer() {
        let results = eval_all(
            "(setq killed-name nil)
             (add-hook 'kill-buffer-hook (lambda () (setq killed-name (buffer-name))))
             (kill-buffer (get-buffer-create \"victim\"))
             killed-name
             (buffer-name)",
        );
        assert_eq!(results[2], "OK t");
        assert_eq!(results[3], "OK \"victim\"");
        assert_eq!(results[4], "OK \"*scratch*\"");
    }

    #[test]
    fn last_buffer_survives_kill() {
        assert_eq!(eval_one("(kill-buffer)"), "OK nil");
    }
}
