// Pipeline processing: validation and repair of raw records

pub mod quality_gate;
