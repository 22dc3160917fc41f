pub mod brain;
pub mod generator;
pub mod matching;
pub mod storage;
