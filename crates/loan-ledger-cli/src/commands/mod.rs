pub mod accrual;
pub mod fees;
pub mod rollover;
