//! Editor operations on top of the raw RPC channel.

use rmpv::Value;

use super::{Rpc, RpcError};

/// Extension trait for editor operations on any `Rpc` channel.
pub trait NvimApi: Rpc {
    /// Execute an Ex command.
    fn command(&mut self, cmd: &str) -> Result<(), RpcError> {
        self.call("nvim_command", vec![Value::from(cmd)])?;
        Ok(())
    }

    /// Evaluate a Vimscript expression.
    fn eval(&mut self, expr: &str) -> Result<Value, RpcError> {
        self.call("nvim_eval", vec![Value::from(expr)])
    }

    /// Queue raw key presses. Fire-and-forget.
    fn input(&mut self, keys: &str) -> Result<(), RpcError> {
        self.notify("nvim_input", vec![Value::from(keys)])
    }

    /// Call a Vimscript function.
    fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        self.call("nvim_call_function", vec![Value::from(name), Value::Array(args)])
    }

    /// Escape a file name for use on an Ex command line.
    fn fnameescape(&mut self, path: &str) -> Result<String, RpcError> {
        let escaped = self.call_function("fnameescape", vec![Value::from(path)])?;
        escaped
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RpcError::InvalidMessage(format!("fnameescape returned {escaped}")))
    }

    fn get_option(&mut self, name: &str) -> Result<Value, RpcError> {
        self.call(
            "nvim_get_option_value",
            vec![Value::from(name), Value::Map(vec![])],
        )
    }

    fn set_option(&mut self, name: &str, value: Value) -> Result<(), RpcError> {
        self.call(
            "nvim_set_option_value",
            vec![Value::from(name), value, Value::Map(vec![])],
        )?;
        Ok(())
    }

    /// Read a variable of the current buffer. `None` when unset.
    fn buf_var(&mut self, name: &str) -> Result<Option<Value>, RpcError> {
        let value = self.call_function(
            "getbufvar",
            vec![Value::from("%"), Value::from(name), Value::Nil],
        )?;
        Ok((!value.is_nil()).then_some(value))
    }

    /// Set a variable of the current buffer.
    fn set_buf_var(&mut self, name: &str, value: Value) -> Result<(), RpcError> {
        self.call(
            "nvim_buf_set_var",
            vec![Value::from(0), Value::from(name), value],
        )?;
        Ok(())
    }

    /// Append a line after the last line of the current buffer.
    fn append_line(&mut self, line: &str) -> Result<(), RpcError> {
        self.call_function("append", vec![Value::from("$"), Value::from(line)])?;
        Ok(())
    }
}

impl<T: Rpc + ?Sized> NvimApi for T {}
