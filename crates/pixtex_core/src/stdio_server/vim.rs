use rpc::{Id, RpcClient, RpcError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum VimError {
    #[error("buffer does not exist")]
    InvalidBuffer,
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

pub type VimResult<T> = Result<T, VimError>;

/// Vim may return 1/0 for true/false.
fn from_vim_bool(value: Value) -> bool {
    match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_u64().map(|n| n == 1).unwrap_or(false),
        _ => false,
    }
}

/// Shareable Vim instance.
#[derive(Debug, Clone)]
pub struct Vim {
    rpc_client: Arc<RpcClient>,
}

impl Vim {
    pub fn new(rpc_client: Arc<RpcClient>) -> Self {
        Self { rpc_client }
    }

    /// Calls the method with given params in Vim and return the call result.
    ///
    /// `method`: Same with `{func}` in `:h call()`.
    pub async fn call<R: DeserializeOwned>(
        &self,
        method: impl AsRef<str>,
        params: impl Serialize,
    ) -> VimResult<R> {
        Ok(self.rpc_client.request(method, params).await?)
    }

    /// Calls the method with no params in Vim and return the call result.
    pub async fn bare_call<R: DeserializeOwned>(&self, method: impl AsRef<str>) -> VimResult<R> {
        Ok(self.rpc_client.request(method, json!([])).await?)
    }

    /// Executes the method with given params in Vim, ignoring the call result.
    ///
    /// `method`: Same with `{func}` in `:h call()`.
    pub fn exec(&self, method: impl AsRef<str>, params: impl Serialize) -> VimResult<()> {
        Ok(self.rpc_client.notify(method, params)?)
    }

    /// Executes the method with no params in Vim, ignoring the call result.
    pub fn bare_exec(&self, method: impl AsRef<str>) -> VimResult<()> {
        Ok(self.rpc_client.notify(method, json!([]))?)
    }

    /// Sends back the result of a request initiated from Vim.
    pub fn send_response(
        &self,
        id: Id,
        output_result: Result<impl Serialize, RpcError>,
    ) -> VimResult<()> {
        Ok(self.rpc_client.send_response(id, output_result)?)
    }

    /////////////////////////////////////////////////////////////////
    //    builtin-function-list
    /////////////////////////////////////////////////////////////////
    pub async fn current_bufnr(&self) -> VimResult<usize> {
        let bufnr: i32 = self.call("bufnr", json!([""])).await?;
        if bufnr < 0 {
            Err(VimError::InvalidBuffer)
        } else {
            Ok(bufnr as usize)
        }
    }

    /// Returns the lines of `bufnr` from `start` to `end`, `"$"` being the
    /// last line.
    pub async fn getbufline(
        &self,
        bufnr: usize,
        start: usize,
        end: impl Serialize,
    ) -> VimResult<Vec<String>> {
        self.call("getbufline", json!([bufnr, start, end])).await
    }

    pub async fn exists(&self, expr: &str) -> VimResult<bool> {
        let value: Value = self.call("exists", json!([expr])).await?;
        Ok(from_vim_bool(value))
    }

    /////////////////////////////////////////////////////////////////
    //    General helpers
    /////////////////////////////////////////////////////////////////
    pub fn echo_info(&self, msg: impl AsRef<str>) -> VimResult<()> {
        self.exec("pixtex#helper#echo_info", json!([msg.as_ref()]))
    }

    pub fn echo_warn(&self, msg: impl AsRef<str>) -> VimResult<()> {
        self.exec("pixtex#helper#echo_warn", json!([msg.as_ref()]))
    }

    /// Pixel height of one character cell of the GUI font, measured on the
    /// Vim side.
    pub async fn font_pixel_height(&self) -> VimResult<f64> {
        self.bare_call("font_pixel_height").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vim_bool() {
        assert!(from_vim_bool(json!(true)));
        assert!(from_vim_bool(json!(1)));
        assert!(!from_vim_bool(json!(false)));
        assert!(!from_vim_bool(json!(0)));
        assert!(!from_vim_bool(json!("1")));
    }
}
