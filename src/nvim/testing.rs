//! Scripted in-memory editor for unit tests.

use std::collections::{HashMap, VecDeque};

use rmpv::Value;

use super::{Notification, Rpc, RpcError};

/// Records every request and answers from canned state.
pub(crate) struct FakeNvim {
    pub calls: Vec<(String, Vec<Value>)>,
    pub notifications: VecDeque<Notification>,
    pub buf_vars: HashMap<String, Value>,
    pub evals: HashMap<String, Value>,
    pub channel: i64,
    pub shortmess: String,
    failing: Vec<(String, String)>,
}

impl FakeNvim {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            notifications: VecDeque::new(),
            buf_vars: HashMap::new(),
            evals: HashMap::new(),
            channel: 3,
            shortmess: "filnxtToOF".to_string(),
            failing: Vec::new(),
        }
    }

    /// Make every command starting with `prefix` fail with `message`.
    pub fn fail_on(&mut self, prefix: &str, message: &str) {
        self.failing.push((prefix.to_string(), message.to_string()));
    }

    pub fn push_notification(&mut self, method: &str, args: Vec<Value>) {
        self.notifications.push_back(Notification {
            method: method.to_string(),
            args,
        });
    }

    /// Ex commands in the order they were issued.
    pub fn commands(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter(|(method, _)| method == "nvim_command")
            .filter_map(|(_, args)| args.first().and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    /// Names of the Vimscript functions called, in order.
    pub fn functions(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter(|(method, _)| method == "nvim_call_function")
            .filter_map(|(_, args)| args.first().and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    fn call_function(&mut self, name: &str, args: &[Value]) -> Result<Value, RpcError> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Nil);
        match name {
            "fnameescape" => {
                let path = arg(0).as_str().unwrap_or_default().to_string();
                Ok(Value::from(fnameescape(&path)))
            }
            "getbufvar" => {
                let key = arg(1).as_str().unwrap_or_default().to_string();
                Ok(self.buf_vars.get(&key).cloned().unwrap_or(arg(2)))
            }
            _ => Ok(Value::Nil),
        }
    }
}

/// A reduced `fnameescape()`: backslash before characters special on the Ex line.
fn fnameescape(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if " \t\n*?[{`$\\%#'\"|!<".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Rpc for FakeNvim {
    fn call(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        self.calls.push((method.to_string(), args.clone()));

        match method {
            "nvim_command" => {
                let cmd = args.first().and_then(Value::as_str).unwrap_or_default();
                match self.failing.iter().find(|(prefix, _)| cmd.starts_with(prefix.as_str())) {
                    Some((_, message)) => Err(RpcError::Remote {
                        message: message.clone(),
                    }),
                    None => Ok(Value::Nil),
                }
            }
            "nvim_eval" => {
                let expr = args.first().and_then(Value::as_str).unwrap_or_default();
                self.evals.get(expr).cloned().ok_or_else(|| RpcError::Remote {
                    message: format!("Vim:E15: Invalid expression: {expr}"),
                })
            }
            "nvim_call_function" => {
                let name = args.first().and_then(Value::as_str).unwrap_or_default().to_string();
                let fargs = match args.get(1) {
                    Some(Value::Array(fargs)) => fargs.clone(),
                    _ => Vec::new(),
                };
                self.call_function(&name, &fargs)
            }
            "nvim_get_option_value" => Ok(Value::from(self.shortmess.as_str())),
            "nvim_set_option_value" => {
                if let Some(value) = args.get(1).and_then(Value::as_str) {
                    self.shortmess = value.to_string();
                }
                Ok(Value::Nil)
            }
            "nvim_buf_set_var" => {
                let key = args.get(1).and_then(Value::as_str).unwrap_or_default().to_string();
                self.buf_vars.insert(key, args.get(2).cloned().unwrap_or(Value::Nil));
                Ok(Value::Nil)
            }
            _ => Ok(Value::Nil),
        }
    }

    fn notify(&mut self, method: &str, args: Vec<Value>) -> Result<(), RpcError> {
        self.calls.push((method.to_string(), args));
        Ok(())
    }

    fn next_notification(&mut self) -> Result<Notification, RpcError> {
        self.notifications.pop_front().ok_or(RpcError::Closed)
    }

    fn channel_id(&mut self) -> Result<i64, RpcError> {
        Ok(self.channel)
    }
}
