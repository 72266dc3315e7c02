//! 反斜杠指令：分词、控制结果、用法文本与分类器

pub mod classifier;
pub mod control;
pub mod token;
pub mod usage;

pub use classifier::{format_selected, is_read_query, Classified, Classifier, ClassifierOptions};
pub use control::Control;
pub use token::{normalize_input, tokenize, CommandKind, Token, RULES};
