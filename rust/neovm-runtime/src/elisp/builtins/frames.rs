use super::*;
use crate::window::{FrameId, KboardId};

impl Evaluator {
    /// A live frame argument; nil means the selected frame.
    fn live_frame_arg(&self, value: &Value) -> Result<FrameId, Flow> {
        match value {
            Value::Nil => Ok(self.frames.selected()),
            Value::Frame(id) if self.frames.is_live(*id) => Ok(*id),
            other => Err(wrong_type("frame-live-p", other.clone())),
        }
    }

    /// Store every `(PARAM . VALUE)` entry of `alist` on `frame`.
    fn modify_frame_params(&mut self, frame: FrameId, alist: &Value) -> Result<(), Flow> {
        for entry in expect_list(alist)? {
            if !entry.is_cons() {
                continue;
            }
            let prop = expect_symbol(&entry.car())?;
            self.store_frame_param(frame, prop, entry.cdr())?;
        }
        Ok(())
    }
}

pub(crate) fn builtin_selected_frame(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("selected-frame", &args, 0)?;
    Ok(Value::Frame(eval.frames.selected()))
}

/// `(make-frame &optional PARAMETERS)`: a new frame on the keyboard of the
/// selected frame.
pub(crate) fn builtin_make_frame(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("make-frame", &args, 0, 1)?;
    let kboard = eval
        .frames
        .get(eval.frames.selected())
        .map_or(KboardId(0), |f| f.kboard);
    let frame = eval.frames.create_frame(kboard);
    eval.modify_frame_params(frame, &arg_or_nil(&args, 0))?;
    tracing::debug!(frame = frame.0, "made frame");
    Ok(Value::Frame(frame))
}

pub(crate) fn builtin_select_frame(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("select-frame", &args, 1, 2)?;
    let frame = eval.live_frame_arg(&args[0])?;
    eval.frames.select(frame);
    Ok(Value::Frame(frame))
}

pub(crate) fn builtin_frame_parameter(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("frame-parameter", &args, 2)?;
    let frame = eval.live_frame_arg(&args[0])?;
    let prop = expect_symbol(&args[1])?;
    let value = eval
        .frames
        .get(frame)
        .and_then(|f| f.param_binding(prop))
        .and_then(|cell| cell.borrow().value.clone());
    Ok(value.unwrap_or(Value::Nil))
}

/// `(frame-parameters &optional FRAME)`: a fresh alist of the bound
/// parameters, most recently added first.
pub(crate) fn builtin_frame_parameters(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("frame-parameters", &args, 0, 1)?;
    let frame = eval.live_frame_arg(&arg_or_nil(&args, 0))?;
    let entries = eval.frames.get(frame).map_or_else(Vec::new, |f| {
        f.params()
            .iter()
            .filter_map(|cell| {
                let binding = cell.borrow();
                binding
                    .value
                    .clone()
                    .map(|value| Value::cons(Value::from_sym(binding.symbol), value))
            })
            .collect()
    });
    Ok(Value::list(entries))
}

pub(crate) fn builtin_modify_frame_parameters(
    eval: &mut Evaluator,
    args: Vec<Value>,
) -> EvalResult {
    expect_args("modify-frame-parameters", &args, 2)?;
    let frame = eval.live_frame_arg(&args[0])?;
    eval.modify_frame_params(frame, &args[1])?;
    Ok(Value::Nil)
}

pub(crate) fn builtin_frame_live_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("frame-live-p", &args, 1)?;
    Ok(Value::bool(
        matches!(&args[0], Value::Frame(id) if eval.frames.is_live(*id)),
    ))
}

/// `(frame-terminal &optional FRAME)`: the terminal of the keyboard
/// `FRAME` reads from.
pub(crate) fn builtin_frame_terminal(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("frame-terminal", &args, 0, 1)?;
    let frame = eval.live_frame_arg(&arg_or_nil(&args, 0))?;
    Ok(eval.frame_terminal(frame))
}

pub(crate) fn builtin_frame_list(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("frame-list", &args, 0)?;
    Ok(Value::list(
        eval.frames.ids().into_iter().map(Value::Frame).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use crate::elisp::tests_support::eval_all;

    #[test]
    fn frames_carry_parameters() {
        let results = eval_all(
            "(setq f (make-frame '((height . 40))))
             (frame-parameter f 'height)
             (frame-parameter f 'name)
             (frame-parameters f)
             (modify-frame-parameters f '((height . 41) (width . 80)))
             (frame-parameter f 'height)
             (frame-parameter nil 'height)
             (length (frame-list))",
        );
        assert_eq!(results[1], "OK 40");
        assert_eq!(results[2], "OK \"F2\"");
        assert_eq!(results[3], "OK ((height . 40) (name . \"F2\"))");
        assert_eq!(results[5], "OK 41");
        assert_eq!(results[6], "OK nil");
        assert_eq!(results[7], "OK 2");
    }

    #[test]
    fn frames_on_one_keyboard_share_a_terminal() {
        let results = eval_all(
            "(eq (frame-terminal) (frame-terminal (make-frame)))
             (frame-terminal)
             (frame-terminal 'nope)",
        );
        assert_eq!(results[0], "OK t");
        assert_eq!(results[1], "OK #<terminal 0>");
        assert_eq!(results[2], "ERR (wrong-type-argument frame-live-p nope)");
    }

    #[test]
    fn select_frame_changes_the_selected_frame() {
        let results = eval_all(
            "(setq first (selected-frame) second (make-frame))
             (eq (select-frame second) (selected-frame))
             (eq first (selected-frame))
             (frame-live-p second)
             (frame-live-p 'not-a-frame)
             (select-frame 'not-a-frame)",
        );
        assert_eq!(results[1], "OK t");
        assert_eq!(results[2], "OK nil");
        assert_eq!(results[3], "OK t");
        assert_eq!(results[4], "OK nil");
        assert_eq!(
            results[5],
            "ERR (wrong-type-argument frame-live-p not-a-frame)"
        );
    }
}
