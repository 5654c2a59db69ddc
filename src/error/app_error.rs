use thiserror::Error;

/// 应用错误
#[derive(Error, Debug)]
pub enum AppError {
    /// 存储后端不可用（连接失败或配置缺失，缺少 REDIS_HOST 属于构造期致命错误）
    #[error("存储不可用: {0}")]
    StorageUnavailable(String),

    /// 存储操作超出限定超时
    #[error("存储操作超时: {0}")]
    StorageTimeout(String),

    /// 缓存数据解析失败，读路径一律视为未命中
    #[error("缓存数据解析失败: key={key}, {detail}")]
    MalformedPayload { key: String, detail: String },

    /// 外部计算服务调用失败，body 原样透传
    #[error("计算服务调用失败: classes={classes}, status={status}, body={body}")]
    ComputeProducer {
        classes: String,
        status: u16,
        body: String,
    },

    /// 无效输入（重复/空 symbol、非法评分、未知周期名）
    #[error("无效输入: {0}")]
    InvalidInput(String),
}

pub type AppResult<T> = Result<T, AppError>;
