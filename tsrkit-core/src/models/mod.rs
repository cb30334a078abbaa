pub mod delimited;
pub mod strand;
pub mod table;
pub mod tsr;
pub mod tss;

// re-export for cleaner imports
pub use self::delimited::DelimitedTable;
pub use self::strand::Strand;
pub use self::table::{columns, Cell, Column, Table, Value};
pub use self::tsr::{DominantTss, ShapeClass, ShapeMetrics, TsrMetrics, TsrRecord, TsrTable};
pub use self::tss::{TssKey, TssRecord, TssTable};
