// 領域層：時段模型與擷取策略依賴的介面

pub mod model;
pub mod ports;
