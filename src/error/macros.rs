//! # 错误处理宏

/// 快速创建配置错误的宏
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::GateError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::GateError::config(format!($fmt, $($arg)*))
    };
}

/// 快速创建参数错误的宏
#[macro_export]
macro_rules! invalid_param {
    ($msg:expr) => {
        $crate::error::GateError::invalid_param($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::GateError::invalid_param(format!($fmt, $($arg)*))
    };
}

/// 确保条件成立，否则返回参数错误
#[macro_export]
macro_rules! ensure_param {
    ($cond:expr, $msg:expr) => {
        if !($cond) {
            return Err($crate::invalid_param!($msg));
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            return Err($crate::invalid_param!($fmt, $($arg)*));
        }
    };
}
