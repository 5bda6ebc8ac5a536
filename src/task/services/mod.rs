//! Orchestration services for the task board.

mod board;

pub use board::{
    BoardConfig, BoardResult, BoardServiceError, NewTaskRequest, TaskBoardService,
};
