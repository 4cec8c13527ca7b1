pub mod convlstm;
