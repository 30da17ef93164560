pub mod onnx_classifier;
