pub mod batch;
pub mod matcher;
pub mod pipeline;
pub mod preprocess;
pub mod template;
pub mod transform;
pub mod types;
pub mod validator;
