pub mod onnx_blazeface_detector;
